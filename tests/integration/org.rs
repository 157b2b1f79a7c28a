//! Organization service integration tests: CRUD and FetchXML queries.

use super::common::{get_client, test_marker};
use crm_soap_api::Entity;

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_create_retrieve_update_delete_roundtrip() {
    let client = get_client();
    let marker = test_marker();

    let mut account = Entity::new("account");
    account.set_text("name", &marker);
    let id = client
        .create(&mut account)
        .await
        .expect("Create should succeed");
    assert_eq!(account.id, id);

    let fetched = client
        .retrieve(&account, Some(&["name"]))
        .await
        .expect("Retrieve should succeed");
    assert_eq!(
        fetched.get("name").map(|v| v.display_text()),
        Some(marker.clone())
    );

    let mut updated = fetched;
    updated.set_text("name", &format!("{marker} updated"));
    client.update(&updated).await.expect("Update should succeed");

    client.delete(&updated).await.expect("Delete should succeed");
}

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_retrieve_multiple_pages_through_all_accounts() {
    let client = get_client();

    let one_page = client
        .retrieve_multiple_entities("account", false, None, Some(2), None)
        .await
        .expect("Single page query should succeed");
    assert!(one_page.count <= 2);

    let all = client
        .retrieve_multiple_entities("account", true, None, Some(2), None)
        .await
        .expect("All-pages query should succeed");
    assert!(!all.more_records);
    assert!(all.count >= one_page.count);
}

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_retrieve_single_returns_at_most_one() {
    let client = get_client();
    let fetch = r#"<fetch version="1.0" output-format="xml-platform" mapping="logical">
                     <entity name="account"><all-attributes/></entity>
                   </fetch>"#;
    let result = client
        .retrieve_single(fetch)
        .await
        .expect("Query should succeed");
    if let Some(entity) = result {
        assert_eq!(entity.logical_name, "account");
    }
}

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_execute_whoami() {
    let client = get_client();
    let results = client
        .execute_action("WhoAmI", &[])
        .await
        .expect("WhoAmI should succeed");
    assert!(results.contains_key("UserId"));
}
