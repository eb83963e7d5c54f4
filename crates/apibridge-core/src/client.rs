use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{BridgeError, BridgeResult};

static CLIENT_CACHE: OnceLock<Mutex<HashMap<Option<String>, wreq::Client>>> = OnceLock::new();

/// Process-wide HTTP client, one per outbound proxy setting. Timeouts and
/// pooling stay at the client's defaults; this layer adds none of its own.
pub fn shared_client(proxy: Option<&str>) -> BridgeResult<wreq::Client> {
    let key = proxy
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    let cache = CLIENT_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache
        .lock()
        .map_err(|_| BridgeError::Transport("http client cache lock poisoned".to_string()))?;
    if let Some(client) = guard.get(&key) {
        return Ok(client.clone());
    }

    let mut builder = wreq::Client::builder();
    if let Some(proxy_url) = key.as_deref() {
        builder = builder
            .proxy(wreq::Proxy::all(proxy_url).map_err(|err| BridgeError::Transport(err.to_string()))?);
    }
    let client = builder
        .build()
        .map_err(|err| BridgeError::Transport(err.to_string()))?;
    guard.insert(key, client.clone());
    Ok(client)
}
