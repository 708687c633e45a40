//! `frontgate health` — probe a running instance.
//!
//! Sends a request carrying the `health-check` header to the given URL
//! and reports the result. Any status other than 200 is an error whose
//! message includes the body the instance returned.

use http_body_util::BodyExt;

use crate::cli::HealthArgs;
use crate::error::FrontgateError;
use crate::health::HEALTH_CHECK_HEADER;
use crate::server::build_http_client;

pub async fn execute(args: HealthArgs) -> Result<(), FrontgateError> {
    let uri: hyper::Uri =
        args.url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| FrontgateError::UriParse {
                source: Box::new(e),
            })?;

    let client = build_http_client();

    let req = hyper::Request::builder()
        .uri(uri)
        .header(HEALTH_CHECK_HEADER, "frontgate-cli")
        .body(http_body_util::Full::new(bytes::Bytes::new()))
        .map_err(|e| FrontgateError::HttpRequest {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(std::time::Duration::from_secs(10), client.request(req))
        .await
        .map_err(|_| FrontgateError::HttpRequest {
            source: "health check timed out after 10s".into(),
        })?
        .map_err(|e| FrontgateError::HttpRequest {
            source: Box::new(e),
        })?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| FrontgateError::HttpRequest {
            source: Box::new(e),
        })?
        .to_bytes();
    let body = String::from_utf8_lossy(&body).trim().to_string();

    if status != hyper::StatusCode::OK {
        return Err(FrontgateError::HealthCheckFailed { status, body });
    }

    if args.json {
        println!("{}", serde_json::json!({ "status": status.as_u16(), "body": body }));
    } else {
        println!("\u{2713} frontgate is healthy ({}): {body}", args.url);
    }

    Ok(())
}
