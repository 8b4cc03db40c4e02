pub mod api;

use crate::cli::Args;
use crate::relay::Relay;
use crate::slo::SloClient;
use self::api::AppState;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(addr: String, relay: Arc<Relay>, slo: Arc<SloClient>, args: Args) -> Self {
        Self {
            addr,
            state: AppState { relay, slo },
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(&self.addr, self.state.clone(), &self.args.static_dir).await
    }
}
