//! Console logging and the `fetch` analytics sink

use vitals_core::{AnalyticsPayload, Metric, MetricSink};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};
use web_sys::{Request, RequestInit, RequestMode, Response};

use crate::storage::describe;

/// Console logger handed to the reporter
pub fn console_metric(metric: &Metric) {
    web_sys::console::log_1(
        &format!(
            "[Web Vitals] {}: {} ({})",
            metric.name, metric.value, metric.rating
        )
        .into(),
    );
}

/// Posts each payload as JSON to the analytics endpoint
///
/// Delivery is spawned on the microtask queue and never awaited. Failures are
/// written to the console and dropped.
pub struct FetchSink {
    endpoint: String,
}

impl FetchSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

impl MetricSink for FetchSink {
    fn send(&self, payload: &AnalyticsPayload) {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                web_sys::console::warn_1(&format!("Failed to encode metric: {}", e).into());
                return;
            }
        };

        let endpoint = self.endpoint.clone();
        spawn_local(async move {
            if let Err(e) = post_json(&endpoint, &body).await {
                web_sys::console::warn_1(
                    &format!("Failed to report metric: {}", describe(&e)).into(),
                );
            }
        });
    }
}

async fn post_json(url: &str, body: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("No window")?;

    let opts = RequestInit::new();
    opts.set_method("POST");
    opts.set_mode(RequestMode::Cors);
    opts.set_body(&JsValue::from_str(body));

    let request = Request::new_with_str_and_init(url, &opts)?;
    request.headers().set("Content-Type", "application/json")?;

    let response = JsFuture::from(window.fetch_with_request(&request)).await?;
    let response: Response = response.dyn_into()?;
    ensure_ok(&response)
}

/// Turn a non-2xx response into an error
fn ensure_ok(response: &Response) -> Result<(), JsValue> {
    if !response.ok() {
        return Err(JsValue::from_str(&format!(
            "Analytics endpoint returned {}",
            response.status()
        )));
    }
    Ok(())
}
