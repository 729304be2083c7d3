mod archive;
mod codec;
mod metadata;
mod name;

pub use archive::{
    backup_file_name, ensure_zip_suffix, versioned_file_name, ArchiveKind, PackageArchive,
    ARCHIVE_EXTENSION, BACKUP_MARKER,
};
pub use codec::{ArchiveCodec, ZipCodec};
pub use metadata::{AddonMetadata, AddonState, DESCRIPTOR_FILE};
pub use name::{AddonName, NamePolicy};
