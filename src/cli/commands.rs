//! CLI commands and argument parsing

use crate::arm::StorageAccount;
use crate::client::AzureClient;
use crate::config::Config;
use crate::error::{AzvisorError, Result};
use crate::inventory::{FilterKind, FilterPattern};
use crate::provision::DiskRef;
use crate::storage::{BlobRow, SasPermission, SasRequest, SasResourceType, SasService};
use crate::utils::format::{OutputFormat, TableFormatter};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

#[derive(Parser)]
#[command(name = "azv")]
#[command(about = "Inventory and provisioning client for Azure virtual machines")]
#[command(version, author)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Configuration file (defaults to the per-user azvisor.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable colored table headers
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List virtual machines, optionally filtered
    Vms {
        /// Filter kind: location, tag_name, tag_value, resource_group or vmpowerstate
        #[arg(long = "filter-type", requires = "filter_value")]
        filter_type: Option<String>,
        /// Filter value (a regex for tag and resource group filters, 1/0 for power state)
        #[arg(long = "filter-value")]
        filter_value: Option<String>,
    },
    /// Show the resource group of a VM
    ResourceGroup {
        vm_name: String,
    },
    /// Find a resource group and storage account for a copy of a VM
    FreeResources {
        vm_name: String,
        /// Only consider this resource group
        #[arg(short, long)]
        resource_group: Option<String>,
    },
    /// List storage accounts of the subscription or of one resource group
    StorageAccounts {
        #[arg(short, long)]
        resource_group: Option<String>,
    },
    /// List blob containers of a storage account
    Containers {
        account: String,
    },
    /// List VHD blobs of a storage account
    Vhds {
        account: String,
    },
    /// Check whether a blob exists
    BlobExists {
        uri: String,
    },
    /// Mint an account SAS
    Sas {
        account: String,
        /// Permission, as a word or letter (read, write, delete, list, ...)
        #[arg(long, default_value = "list")]
        permission: String,
        /// Resource type (service, container, object)
        #[arg(long, default_value = "container")]
        resource_type: String,
        /// Service (blob, queue, table, file)
        #[arg(long, default_value = "blob")]
        service: String,
        /// Validity in minutes
        #[arg(long, default_value_t = 60)]
        minutes: u32,
    },
    /// Copy a managed disk
    CopyDisk {
        /// Resource id of the source disk
        #[arg(long)]
        source: String,
        /// Name of the new disk
        #[arg(long)]
        name: String,
        #[arg(short, long)]
        resource_group: String,
        #[arg(long)]
        region: String,
    },
    /// Delete a managed disk or a VHD blob
    DeleteDisk {
        name: String,
        /// Resource group of a managed disk
        #[arg(short, long, conflicts_with_all = ["account", "container_path"])]
        resource_group: Option<String>,
        /// Storage account holding an unmanaged disk
        #[arg(long, requires = "container_path")]
        account: Option<String>,
        /// Container path of an unmanaged disk
        #[arg(long)]
        container_path: Option<String>,
    },
    /// List VM sizes, optionally for one region
    VmSizes {
        #[arg(long)]
        region: Option<String>,
    },
}

#[derive(Debug, Serialize, Tabled)]
struct NameRow {
    #[tabled(rename = "Name")]
    name: String,
}

#[derive(Debug, Serialize, Tabled)]
struct StorageAccountRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Resource Group")]
    resource_group: String,
    #[tabled(rename = "Location")]
    location: String,
}

impl From<&StorageAccount> for StorageAccountRow {
    fn from(account: &StorageAccount) -> Self {
        Self {
            name: account.name.clone(),
            resource_group: account.resource_group().unwrap_or_default(),
            location: account.location.clone(),
        }
    }
}

impl Cli {
    pub async fn execute(self, mut config: Config) -> Result<()> {
        if self.format == OutputFormat::Json {
            config.output_json = true;
        }
        config.no_color |= self.no_color;

        let formatter = TableFormatter::new(self.format, config.no_color);
        let client = AzureClient::new(&config)?;

        match self.command {
            Commands::Vms {
                filter_type,
                filter_value,
            } => execute_vms(&client, &formatter, filter_type, filter_value).await,
            Commands::ResourceGroup { vm_name } => {
                let group = client
                    .inventory()
                    .get_resource_group(&vm_name)
                    .await?
                    .ok_or_else(|| AzvisorError::not_found("Virtual machine", &vm_name))?;
                println!("{group}");
                Ok(())
            }
            Commands::FreeResources {
                vm_name,
                resource_group,
            } => {
                let free = client
                    .inventory()
                    .compute_free_resources(&vm_name, resource_group.as_deref())
                    .await?;
                println!("{}", formatter.format_value(&free)?);
                Ok(())
            }
            Commands::StorageAccounts { resource_group } => {
                let accounts = match resource_group {
                    Some(group) => client.storage().get_storage_account(&group).await?,
                    None => client.storage().storage_accounts().await?.to_vec(),
                };
                let rows: Vec<StorageAccountRow> = accounts.iter().map(StorageAccountRow::from).collect();
                println!("{}", formatter.format_table(&rows)?);
                Ok(())
            }
            Commands::Containers { account } => {
                let rows: Vec<NameRow> = client
                    .storage()
                    .get_containers_in_storage_account(&account)
                    .await?
                    .into_iter()
                    .map(|name| NameRow { name })
                    .collect();
                println!("{}", formatter.format_table(&rows)?);
                Ok(())
            }
            Commands::Vhds { account } => {
                let blobs = client.storage().get_vhds_in_storage_account(&account).await?;
                let rows: Vec<BlobRow> = blobs.iter().map(BlobRow::from).collect();
                println!("{}", formatter.format_table(&rows)?);
                Ok(())
            }
            Commands::BlobExists { uri } => {
                let exists = client.storage().check_blob_exists_in_storage_account(&uri).await?;
                println!("{exists}");
                Ok(())
            }
            Commands::Sas {
                account,
                permission,
                resource_type,
                service,
                minutes,
            } => {
                let request = SasRequest::new(
                    permission.parse::<SasPermission>()?,
                    resource_type.parse::<SasResourceType>()?,
                    service.parse::<SasService>()?,
                    minutes,
                )?;
                println!("{}", client.storage().try_storage_sas(&account, &request).await?);
                Ok(())
            }
            Commands::CopyDisk {
                source,
                name,
                resource_group,
                region,
            } => {
                let disk = client
                    .provisioner()
                    .copy_managed_disk(&resource_group, &source, &name, &region)
                    .await?;
                println!("{}", formatter.format_value(&disk)?);
                Ok(())
            }
            Commands::DeleteDisk {
                name,
                resource_group,
                account,
                container_path,
            } => {
                let disk = match (resource_group, account, container_path) {
                    (Some(resource_group), None, None) => DiskRef::Managed { name, resource_group },
                    (None, Some(storage_account), Some(container_path)) => DiskRef::Unmanaged {
                        name,
                        storage_account,
                        container_path,
                    },
                    _ => {
                        return Err(AzvisorError::invalid_argument(
                            "Give either --resource-group or --account with --container-path",
                        ))
                    }
                };
                let outcome = client.provisioner().delete_disk(&disk).await?;
                println!("{:?}", outcome);
                Ok(())
            }
            Commands::VmSizes { region } => {
                let sizes = client.discovery().list_vm_sizes(region.as_deref()).await?;
                println!("{}", formatter.format_table(&sizes)?);
                Ok(())
            }
        }
    }
}

async fn execute_vms(
    client: &AzureClient,
    formatter: &TableFormatter,
    filter_type: Option<String>,
    filter_value: Option<String>,
) -> Result<()> {
    let pattern = match (filter_type, filter_value) {
        (Some(kind), Some(value)) => Some(FilterPattern::new(FilterKind::parse(&kind), value)),
        _ => None,
    };

    let rows: Vec<NameRow> = client
        .inventory()
        .get_all_vms(pattern.as_ref())
        .await?
        .into_iter()
        .map(|name| NameRow { name })
        .collect();
    println!("{}", formatter.format_table(&rows)?);
    Ok(())
}
