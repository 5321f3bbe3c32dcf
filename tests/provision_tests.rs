mod common;

use azvisor::provision::{DeleteOutcome, DiskRef, ImageSpec, NicSpec, VmCredentials, VmSpec};
use azvisor::AzvisorError;
use common::{client, mount_storage_account, rg_path, test_config};
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn resource_path(resource_group: &str, provider_type: &str, name: &str) -> String {
    format!("{}/providers/{}/{}", rg_path(resource_group), provider_type, name)
}

fn state(provisioning_state: &str) -> ResponseTemplate {
    state_with(200, provisioning_state)
}

fn state_with(status: u16, provisioning_state: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "properties": {"provisioningState": provisioning_state}
    }))
}

fn nic_spec() -> NicSpec {
    NicSpec {
        name: "vm1-nic".to_string(),
        resource_group: "rg1".to_string(),
        subnet_id: "/subscriptions/sub-1/resourceGroups/net/providers/Microsoft.Network/virtualNetworks/vnet/subnets/default".to_string(),
    }
}

fn vm_spec(credentials: Option<VmCredentials>) -> VmSpec {
    VmSpec {
        name: "vm1".to_string(),
        resource_group: "rg1".to_string(),
        location: "eastus".to_string(),
        image_id: format!("{}/providers/Microsoft.Compute/images/base", rg_path("rg1")),
        vm_size: Some("Standard_D2s_v3".to_string()),
        os: "Windows".to_string(),
        tags: HashMap::new(),
        nic: nic_spec(),
        credentials,
    }
}

#[tokio::test]
async fn managed_disk_delete_is_idempotent() {
    let server = MockServer::start().await;
    let disk_path = resource_path("rg1", "Microsoft.Compute/disks", "data1");
    Mock::given(method("DELETE"))
        .and(path(disk_path.clone()))
        .and(query_param("api-version", "2017-03-30"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(disk_path))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let disk = DiskRef::Managed {
        name: "data1".to_string(),
        resource_group: "rg1".to_string(),
    };
    assert_eq!(client.provisioner().delete_disk(&disk).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(
        client.provisioner().delete_disk(&disk).await.unwrap(),
        DeleteOutcome::AlreadyAbsent
    );
}

#[tokio::test]
async fn managed_disk_in_use_cannot_be_deleted() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(409).set_body_string("attached"))
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let disk = DiskRef::Managed {
        name: "os1".to_string(),
        resource_group: "rg1".to_string(),
    };
    match client.provisioner().delete_disk(&disk).await {
        Err(AzvisorError::ApiError { status, message }) => {
            assert_eq!(status, Some(409));
            assert!(message.contains("Managed Disk os1 cannot be deleted"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn unmanaged_disk_delete_uses_a_delete_sas() {
    let server = MockServer::start().await;
    mount_storage_account(&server, "rg1", "acct1", "sv=2017-04-17&sp=d&sig=abc").await;
    Mock::given(method("DELETE"))
        .and(path("/acct1/vhds/vm1-os.vhd"))
        .and(query_param("sp", "d"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let disk = DiskRef::Unmanaged {
        name: "vm1-os.vhd".to_string(),
        storage_account: "acct1".to_string(),
        container_path: "vhds".to_string(),
    };
    assert_eq!(client.provisioner().delete_disk(&disk).await.unwrap(), DeleteOutcome::Deleted);
    assert_eq!(
        client.provisioner().delete_disk(&disk).await.unwrap(),
        DeleteOutcome::AlreadyAbsent
    );
}

#[tokio::test]
async fn unmanaged_disk_without_sas_fails() {
    let server = MockServer::start().await;
    let client = client(&test_config(&server));

    let disk = DiskRef::Unmanaged {
        name: "vm1-os.vhd".to_string(),
        storage_account: "unknown".to_string(),
        container_path: "vhds".to_string(),
    };
    assert!(matches!(
        client.provisioner().delete_disk(&disk).await,
        Err(AzvisorError::SasUnavailable { .. })
    ));
}

#[tokio::test]
async fn nic_polling_gives_up_after_five_checks() {
    let server = MockServer::start().await;
    let nic_path = resource_path("rg1", "Microsoft.Network/networkInterfaces", "vm1-nic");
    Mock::given(method("PUT"))
        .and(path(nic_path.clone()))
        .and(query_param("api-version", "2023-05-01"))
        .respond_with(state_with(201, "Updating"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(nic_path))
        .respond_with(state("Updating"))
        .expect(4)
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let result = client.provisioner().create_nic(&nic_spec(), "eastus").await;
    assert!(matches!(
        result,
        Err(AzvisorError::ProvisioningTimeout { attempts: 5, .. })
    ));
}

#[tokio::test]
async fn vm_is_created_after_its_nic() {
    let server = MockServer::start().await;
    let nic_path = resource_path("rg1", "Microsoft.Network/networkInterfaces", "vm1-nic");
    let vm_path = resource_path("rg1", "Microsoft.Compute/virtualMachines", "vm1");
    let nic_id = nic_path.clone();

    Mock::given(method("PUT"))
        .and(path(nic_path))
        .and(body_partial_json(json!({"location": "eastus"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": nic_id,
            "properties": {"provisioningState": "Succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(vm_path.clone()))
        .and(query_param("api-version", "2022-11-01"))
        .and(body_partial_json(json!({
            "properties": {
                "hardwareProfile": {"vmSize": "Standard_D2s_v3"},
                "osProfile": {"adminUsername": "azureadmin", "computerName": "vm1"},
                "networkProfile": {"networkInterfaces": [{"id": nic_id}]}
            }
        })))
        .respond_with(state_with(201, "Creating"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(vm_path))
        .respond_with(state("Succeeded"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&server);
    config
        .credentials
        .insert("windows".to_string(), "azureadmin:S3cret!".to_string());
    let client = client(&config);

    let name = client.provisioner().create_vm_from_image(&vm_spec(None)).await.unwrap();
    assert_eq!(name, "vm1");
}

#[tokio::test]
async fn vm_without_credentials_is_rejected_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let result = client.provisioner().create_vm_from_image(&vm_spec(None)).await;
    assert!(matches!(result, Err(AzvisorError::ConfigError(_))));
}

#[tokio::test]
async fn vm_poll_stops_at_the_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(resource_path("rg1", "Microsoft.Network/networkInterfaces", "vm1-nic")))
        .respond_with(state("Succeeded"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(resource_path("rg1", "Microsoft.Compute/virtualMachines", "vm1")))
        .respond_with(state_with(201, "Creating"))
        .mount(&server)
        .await;
    let mut config = test_config(&server);
    config.polling.resource_deadline_seconds = 0;
    let client = client(&config);

    let spec = vm_spec(Some(VmCredentials::new("admin", "pw")));
    let result = client.provisioner().create_vm_from_image(&spec).await;
    assert!(matches!(result, Err(AzvisorError::DeadlineExceeded { .. })));
}

#[tokio::test]
async fn failed_image_capture_is_reported() {
    let server = MockServer::start().await;
    let image_path = resource_path("rg1", "Microsoft.Compute/images", "golden");
    Mock::given(method("PUT"))
        .and(path(image_path.clone()))
        .and(query_param("api-version", "2023-07-01"))
        .and(body_partial_json(json!({
            "properties": {"sourceVirtualMachine": {"id": "/vm/source"}}
        })))
        .respond_with(state_with(201, "Creating"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(state("Failed"))
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let spec = ImageSpec {
        name: "golden".to_string(),
        resource_group: "rg1".to_string(),
        location: "eastus".to_string(),
        source_vm_id: "/vm/source".to_string(),
        tags: HashMap::new(),
    };
    match client.provisioner().create_image_from_vm(&spec).await {
        Err(AzvisorError::ProvisioningFailed { state, .. }) => assert_eq!(state, "Failed"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn disk_copy_returns_name_and_id() {
    let server = MockServer::start().await;
    let copy_path = resource_path("rg1", "Microsoft.Compute/disks", "data1-copy");
    Mock::given(method("PUT"))
        .and(path(copy_path.clone()))
        .and(query_param("api-version", "2023-04-02"))
        .and(body_partial_json(json!({
            "location": "westus",
            "properties": {"creationData": {"createOption": "Copy", "sourceResourceId": "/disk/data1"}}
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "name": "data1-copy",
            "id": copy_path
        })))
        .expect(1)
        .mount(&server)
        .await;
    let client = client(&test_config(&server));

    let copied = client
        .provisioner()
        .copy_managed_disk("rg1", "/disk/data1", "data1-copy", "westus")
        .await
        .unwrap();
    assert_eq!(copied.name, "data1-copy");
    assert_eq!(copied.id, copy_path);
}
