//! HTTP/HTTPS probe driver.

use super::{result, HealthState, ProbeResult, PROBE_TIMEOUT};
use crate::config::Endpoint;

/// GET `protocol://host` and judge the endpoint by status class: 2xx/3xx is
/// up, everything else (including transport failure) is down.
pub async fn probe_http(endpoint: &Endpoint, user_agent: &str) -> ProbeResult {
    let url = format!(
        "{}://{}",
        endpoint.protocol.trim().to_ascii_lowercase(),
        endpoint.host
    );

    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            return result(
                endpoint,
                HealthState::Down,
                format!("{} - {}", endpoint.host, e),
            )
        }
    };

    let response = match client
        .get(&url)
        .header(reqwest::header::USER_AGENT, user_agent)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            return result(
                endpoint,
                HealthState::Down,
                format!("{} - {}", endpoint.host, e),
            )
        }
    };

    let code = response.status().as_u16();
    let description = format!("{} - {}", endpoint.host, code);
    if (200..400).contains(&code) {
        result(endpoint, HealthState::Up, description)
    } else {
        result(endpoint, HealthState::Down, description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("127.0.0.1:{}", addr.port())
    }

    fn endpoint(host: String) -> Endpoint {
        Endpoint {
            name: "svc".to_string(),
            protocol: "http".to_string(),
            host,
            interval: 1.0,
        }
    }

    #[tokio::test]
    async fn success_status_is_up() {
        let host = serve(Router::new().route("/", get(|| async { "ok" }))).await;
        let res = probe_http(&endpoint(host.clone()), "BeepMonitor/1.0").await;
        assert_eq!(res.state, vec!["up"]);
        assert_eq!(res.description, format!("{host} - 200"));
        assert_eq!(res.protocol, "HTTP");
    }

    #[tokio::test]
    async fn server_error_is_down() {
        let host = serve(Router::new().route(
            "/",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        ))
        .await;
        let res = probe_http(&endpoint(host.clone()), "BeepMonitor/1.0").await;
        assert_eq!(res.state, vec!["down"]);
        assert_eq!(res.description, format!("{host} - 500"));
    }

    #[tokio::test]
    async fn not_found_is_down() {
        let host = serve(Router::new()).await;
        let res = probe_http(&endpoint(host.clone()), "BeepMonitor/1.0").await;
        assert_eq!(res.state, vec!["down"]);
        assert_eq!(res.description, format!("{host} - 404"));
    }

    #[tokio::test]
    async fn connection_refused_is_down() {
        let res = probe_http(&endpoint("127.0.0.1:9".to_string()), "BeepMonitor/1.0").await;
        assert_eq!(res.state, vec!["down"]);
        assert!(res.description.starts_with("127.0.0.1:9 - "));
    }
}
