// serve.rs — Reference decision service.
//
// Answers every named operation with "proceed" unless one of its paths
// matches a `--deny` glob, in which case it answers "denied". Unknown
// operations get "not implemented". Meant for trying out an interception
// layer, not as a policy engine.

use anyhow::Context;
use glob::Pattern;
use tracing::info;
use vfsx_bridge::protocol::{FAIL_AUTHORIZATION, FAIL_NOT_IMPLEMENTED, SUCCESS_TRANSPARENT};
use vfsx_bridge::{BridgeConfig, Operation};
use vfsx_service::{DecisionHandler, Request, Server, Session};

pub fn execute(config: &BridgeConfig, deny: &[String]) -> anyhow::Result<()> {
    let responder = GlobResponder::new(deny)?;
    let server = Server::bind(&config.socket_path, responder)?;
    println!(
        "Serving decisions on {} ({} deny pattern(s)). Ctrl-C to stop.",
        server.local_path().display(),
        deny.len()
    );
    server.serve()?;
    Ok(())
}

/// Denies operations on paths matching any of a set of globs.
#[derive(Debug, Clone)]
pub struct GlobResponder {
    deny: Vec<Pattern>,
}

impl GlobResponder {
    pub fn new(patterns: &[String]) -> anyhow::Result<Self> {
        let deny = patterns
            .iter()
            .map(|p| Pattern::new(p).with_context(|| format!("invalid deny pattern {:?}", p)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { deny })
    }

    fn denies(&self, path: &str) -> bool {
        self.deny.iter().any(|p| p.matches(path))
    }
}

impl DecisionHandler for GlobResponder {
    fn decide(&self, session: &Session, request: &Request) -> i32 {
        if let Operation::Other(_) = request.operation {
            return FAIL_NOT_IMPLEMENTED;
        }

        // A rename also writes its destination.
        let mut paths = request.target.iter().map(String::as_str).collect::<Vec<_>>();
        if request.operation == Operation::Rename {
            paths.extend(request.args.first().map(String::as_str));
        }

        match paths.into_iter().find(|path| self.denies(path)) {
            Some(path) => {
                info!(
                    operation = %request.operation,
                    user = %session.user,
                    origin = %session.origin,
                    path,
                    "denied"
                );
                FAIL_AUTHORIZATION
            }
            None => SUCCESS_TRANSPARENT,
        }
    }
}
