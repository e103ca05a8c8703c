// tests/fallback_connect.rs
//
// Connection probing: any authentication failure selects the synthetic backend
// and the process keeps working with it.

use std::time::Duration;

use thread_scout::source::{connect_with, Credentials, Endpoints, SearchQuery, DEFAULT_USER_AGENT};
use thread_scout::ConnectorMode;

fn bogus_credentials() -> Credentials {
    Credentials {
        client_id: "nope".into(),
        client_secret: "nope".into(),
        username: "nobody".into(),
        password: "wrong".into(),
        user_agent: DEFAULT_USER_AGENT.into(),
    }
}

/// Nothing listens on port 9 locally; the request fails fast.
fn unreachable() -> Endpoints {
    Endpoints {
        auth_url: "http://127.0.0.1:9/api/v1/access_token".into(),
        api_base: "http://127.0.0.1:9".into(),
    }
}

#[tokio::test]
async fn rejected_credentials_fall_back_to_synthetic_data() {
    let conn = connect_with(Some(bogus_credentials()), unreachable(), Duration::from_secs(3)).await;
    assert_eq!(conn.mode(), ConnectorMode::Fallback);

    let threads = conn
        .connector()
        .search(&SearchQuery {
            group: "smallbusiness".into(),
            terms: vec!["crm".into()],
            limit: 25,
            min_popularity_hint: 5,
            max_age_hint: Duration::from_secs(7 * 86_400),
        })
        .await
        .expect("synthetic search never fails");
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|t| t.group == "smallbusiness"));
}

#[tokio::test]
async fn fallback_publish_is_simulated() {
    let conn = connect_with(None, unreachable(), Duration::from_secs(1)).await;
    let receipt = conn
        .connector()
        .publish("mock1", "A shared board fixed our deadline chaos.")
        .await
        .expect("simulated publish");
    assert!(receipt.simulated);
}
