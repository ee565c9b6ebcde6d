//! Game services, each a typed listener on the session manager.

mod assets;
mod chunks;
mod login;
mod ping;
mod position;
mod version;

use voxgate_network::SessionManager;

pub use assets::ASSETS_DIR;
pub use version::SERVER_VERSION;

use crate::GameState;

/// Registers every service listener. Called once during bootstrap, after
/// the world exists and before the transport starts accepting.
pub fn register_all(net: &mut SessionManager<GameState>) {
    ping::register(net);
    login::register(net);
    version::register(net);
    assets::register(net);
    position::register(net);
    chunks::register(net);
}
