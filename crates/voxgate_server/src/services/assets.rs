//! Asset delivery from the server's `Assets` directory.
//!
//! File I/O runs as async tasks off the loop; only the finished response
//! comes back as a loop action.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use voxgate_loop::Priority;
use voxgate_network::SessionManager;
use voxgate_protocol::messages::{
    AssetListRequest, AssetListResponse, AssetRequest, AssetResponse,
};

use crate::GameState;

/// Directory under the server root that holds client-fetchable files.
pub const ASSETS_DIR: &str = "Assets";

/// Refuses names that could escape the assets directory. Returns the
/// relative path to read.
fn sanitize(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    let path = Path::new(name);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));

    safe.then(|| path.to_path_buf())
}

pub(crate) fn register(net: &mut SessionManager<GameState>) {
    net.on::<AssetRequest>("asset", |state, handle, session, request| {
        let assets_dir = state.assets_dir.clone();
        let request_id = request.request_id;
        let name = request.name.clone();

        handle.enqueue_async(Priority::Normal, "asset-read", move |h| async move {
            let data = match sanitize(&name) {
                Some(relative) => match tokio::fs::read(assets_dir.join(relative)).await {
                    Ok(data) => data,
                    Err(e) => {
                        debug!(asset = %name, "asset read failed: {e}");
                        Vec::new()
                    }
                },
                None => {
                    debug!(asset = %name, "rejected unsafe asset name");
                    Vec::new()
                }
            };

            h.enqueue(Priority::Normal, "asset-send", move |state: &mut GameState, _| {
                state.net.send(
                    session,
                    &AssetResponse { request_id, name, data }.into(),
                )
            });
        });

        Ok(())
    });

    net.on::<AssetListRequest>("asset-list", |state, handle, session, request| {
        let assets_dir = state.assets_dir.clone();
        let request_id = request.request_id;

        handle.enqueue_async(Priority::Normal, "asset-list-read", move |h| async move {
            let mut names = Vec::new();

            if let Ok(mut entries) = tokio::fs::read_dir(&assets_dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if entry.file_type().await.is_ok_and(|t| t.is_file()) {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
            }

            names.sort();

            h.enqueue(Priority::Normal, "asset-list-send", move |state: &mut GameState, _| {
                state.net.send(
                    session,
                    &AssetListResponse { request_id, names }.into(),
                )
            });
        });

        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_accepts_plain_relative_names() {
        assert!(sanitize("grass.png").is_some());
        assert!(sanitize("textures/grass.png").is_some());
    }

    #[test]
    fn sanitize_rejects_escapes() {
        assert!(sanitize("").is_none());
        assert!(sanitize("../secrets.txt").is_none());
        assert!(sanitize("/etc/passwd").is_none());
        assert!(sanitize("textures/../../x").is_none());
    }
}
