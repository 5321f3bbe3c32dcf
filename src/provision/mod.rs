//! Resource creation and deletion with provisioning-state polling

pub mod models;
pub mod operations;
pub mod poll;

pub use models::{
    disk_copy_payload, CopiedDisk, DeleteOutcome, DiskRef, ImageSpec, NicSpec, VmCredentials, VmSpec,
    DEFAULT_VM_SIZE,
};
pub use operations::Provisioner;
pub use poll::{wait_for_provisioning, PollBound, PollPolicy, ProvisioningState};
