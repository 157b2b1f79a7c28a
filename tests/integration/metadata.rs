//! Metadata integration tests: entity schema retrieval and caching.

use super::common::get_client;
use crm_soap_api::org::EntityFilters;

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_entity_schema_for_account() {
    let client = get_client();
    let schema = client
        .entity_schema("account")
        .await
        .expect("Schema retrieval should succeed");

    assert_eq!(schema.logical_name, "account");
    assert!(schema.fields.contains_key("name"));

    // Second call is served from the in-memory cache.
    let cached = client
        .entity_schema("account")
        .await
        .expect("Cached schema should load");
    assert_eq!(schema, cached);
}

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_retrieve_entity_raw_metadata() {
    let client = get_client();
    let metadata = client
        .retrieve_entity("contact", EntityFilters::Entity, false)
        .await
        .expect("RetrieveEntity should succeed");
    assert!(metadata.get_child("LogicalName").is_some());
}

#[tokio::test]
#[ignore = "requires a live CRM deployment"]
async fn test_retrieve_all_entities_lists_account() {
    let client = get_client();
    let listings = client
        .retrieve_all_entities()
        .await
        .expect("RetrieveAllEntities should succeed");
    assert!(listings.iter().any(|l| l.logical_name == "account"));
}
