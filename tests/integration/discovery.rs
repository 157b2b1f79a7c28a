//! Discovery service integration tests (require CRM_DISCOVERY_URL).

use super::common::get_client;

#[tokio::test]
#[ignore = "requires a live CRM deployment with a discovery service"]
async fn test_retrieve_organizations() {
    let client = get_client();
    let organizations = client
        .retrieve_organizations()
        .await
        .expect("RetrieveOrganizations should succeed");
    assert!(!organizations.is_empty());
    for org in &organizations {
        assert!(org.unique_name.as_deref().is_some_and(|s| !s.is_empty()));
        assert!(org.endpoints.contains_key("OrganizationService"));
    }
}

#[tokio::test]
#[ignore = "requires a live CRM deployment with a discovery service"]
async fn test_retrieve_organization_by_web_application_url() {
    let client = get_client();
    let url = std::env::var("CRM_URL").expect("CRM_URL is set by get_client");
    let found = client
        .retrieve_organization(&url)
        .await
        .expect("RetrieveOrganization should succeed");
    assert!(found.is_some());
}
