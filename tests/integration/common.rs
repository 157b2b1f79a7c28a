use crm_soap_api::{AuthMode, ClientConfig, CrmClient, Settings};

/// Build an authenticated client for integration tests.
///
/// **IMPORTANT**: integration tests MUST run against a real CRM deployment.
/// This function panics with a helpful message when the environment is not
/// configured; tests should NOT silently pass without a deployment.
pub fn get_client() -> CrmClient {
    let url = require_env("CRM_URL");
    let username = require_env("CRM_USERNAME");
    let password = require_env("CRM_PASSWORD");

    let auth_mode = match std::env::var("CRM_AUTH_MODE").as_deref() {
        Ok("federation") => AuthMode::Federation,
        _ => AuthMode::OnlineFederation,
    };

    let mut settings = Settings::new(url, username, password, auth_mode);
    if let Ok(discovery_url) = std::env::var("CRM_DISCOVERY_URL") {
        settings = settings.with_discovery_url(discovery_url);
    }

    match CrmClient::with_config(settings, ClientConfig::default()) {
        Ok(client) => client,
        Err(e) => panic!("Failed to create CRM client: {e}"),
    }
}

fn require_env(name: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => panic!(
            "\n\nINTEGRATION TEST CONFIGURATION ERROR\n\
             {name} is not set.\n\n\
             Integration tests require a real CRM deployment. Export:\n\
             \x20 CRM_URL='https://org.crm.example.com/XRMServices/2011/Organization.svc'\n\
             \x20 CRM_USERNAME='user@example.com'\n\
             \x20 CRM_PASSWORD='...'\n\
             and optionally CRM_DISCOVERY_URL and CRM_AUTH_MODE=federation.\n\n"
        ),
    }
}

/// A unique marker for records created by a test run.
pub fn test_marker() -> String {
    format!("crm-soap-api test {}", uuid::Uuid::new_v4())
}
