use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use hickory_resolver::{
    config::ResolverConfig, name_server::TokioConnectionProvider, Resolver, TokioResolver,
};
use log::debug;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Resolver for embed hosts that are blocked by the system DNS. Uses the
/// system configuration when readable, Cloudflare otherwise.
#[derive(Debug, Default, Clone)]
pub struct DoHResolver {
    state: Arc<OnceLock<TokioResolver>>,
}

impl DoHResolver {
    fn resolver(&self) -> &TokioResolver {
        self.state.get_or_init(|| {
            Resolver::builder(TokioConnectionProvider::default())
                .unwrap_or_else(|err| {
                    debug!("[dns] system config unavailable ({err}), using cloudflare");
                    Resolver::builder_with_config(
                        ResolverConfig::cloudflare(),
                        TokioConnectionProvider::default(),
                    )
                })
                .build()
        })
    }
}

impl Resolve for DoHResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let this = self.clone();

        Box::pin(async move {
            let lookup = this.resolver().lookup_ip(name.as_str()).await?;
            let addrs: Addrs = Box::new(lookup.into_iter().map(|addr| SocketAddr::new(addr, 0)));

            Ok(addrs)
        })
    }
}
