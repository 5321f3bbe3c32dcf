//! Account SAS grants
//!
//! Every field is sent as its single-letter code. A new grant is minted for
//! each intent; grants are never reused across permission sets.

use crate::error::{AzvisorError, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

macro_rules! sas_code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal / $word:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn code(&self) -> char {
                match self {
                    $($name::$variant => $code),+
                }
            }
        }

        impl FromStr for $name {
            type Err = AzvisorError;

            /// Accepts the full word or its single-letter code
            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_lowercase().as_str() {
                    $($word => Ok($name::$variant),)+
                    other => {
                        let mut chars = other.chars();
                        match (chars.next(), chars.next()) {
                            $((Some($code), None) => Ok($name::$variant),)+
                            _ => Err(AzvisorError::invalid_argument(format!(
                                "Unknown {} '{}'",
                                stringify!($name),
                                s
                            ))),
                        }
                    }
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.code())
            }
        }
    };
}

sas_code_enum!(
    /// Operation allowed by the SAS
    SasPermission {
        Read => 'r' / "read",
        Write => 'w' / "write",
        Delete => 'd' / "delete",
        List => 'l' / "list",
        Add => 'a' / "add",
        Create => 'c' / "create",
        Update => 'u' / "update",
        Process => 'p' / "process",
    }
);

sas_code_enum!(
    /// Level of the storage hierarchy the SAS applies to
    SasResourceType {
        Service => 's' / "service",
        Container => 'c' / "container",
        Object => 'o' / "object",
    }
);

sas_code_enum!(
    SasService {
        Blob => 'b' / "blob",
        Queue => 'q' / "queue",
        Table => 't' / "table",
        File => 'f' / "file",
    }
);

/// Longest validity accepted for a minted SAS (one year)
pub const MAX_SAS_EXPIRY_MINUTES: u32 = 525_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasRequest {
    permission: SasPermission,
    resource_type: SasResourceType,
    service: SasService,
    expiry_minutes: u32,
}

impl SasRequest {
    /// Validity must be between one minute and [`MAX_SAS_EXPIRY_MINUTES`]
    pub fn new(
        permission: SasPermission,
        resource_type: SasResourceType,
        service: SasService,
        expiry_minutes: u32,
    ) -> Result<Self> {
        if expiry_minutes == 0 || expiry_minutes > MAX_SAS_EXPIRY_MINUTES {
            return Err(AzvisorError::invalid_argument(format!(
                "SAS validity must be between 1 and {} minutes, got {}",
                MAX_SAS_EXPIRY_MINUTES, expiry_minutes
            )));
        }
        Ok(Self::preset(permission, resource_type, service, expiry_minutes))
    }

    fn preset(
        permission: SasPermission,
        resource_type: SasResourceType,
        service: SasService,
        expiry_minutes: u32,
    ) -> Self {
        Self {
            permission,
            resource_type,
            service,
            expiry_minutes,
        }
    }

    pub fn expiry_minutes(&self) -> u32 {
        self.expiry_minutes
    }

    /// Enumerate the containers of an account
    pub fn list_containers() -> Self {
        Self::preset(SasPermission::List, SasResourceType::Service, SasService::Blob, 5)
    }

    /// Enumerate the blobs of a container
    pub fn list_blobs() -> Self {
        Self::preset(SasPermission::List, SasResourceType::Container, SasService::Blob, 5)
    }

    pub fn read_blob() -> Self {
        Self::preset(SasPermission::Read, SasResourceType::Object, SasService::Blob, 1)
    }

    pub fn delete_blob() -> Self {
        Self::preset(SasPermission::Delete, SasResourceType::Object, SasService::Blob, 1)
    }

    /// Expiry relative to the issuance instant
    pub fn expiry(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        issued_at
            .checked_add_signed(Duration::minutes(i64::from(self.expiry_minutes)))
            .ok_or_else(|| AzvisorError::invalid_argument("SAS expiry is out of range"))
    }

    /// `ListAccountSas` request body
    pub fn body(&self, issued_at: DateTime<Utc>) -> Result<Value> {
        Ok(json!({
            "signedExpiry": self.expiry(issued_at)?.to_rfc3339_opts(SecondsFormat::Secs, true),
            "signedPermission": self.permission.code().to_string(),
            "signedResourceTypes": self.resource_type.code().to_string(),
            "signedServices": self.service.code().to_string(),
        }))
    }
}
