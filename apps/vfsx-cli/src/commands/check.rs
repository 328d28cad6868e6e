// check.rs — Submit one gated operation and print the decision.
//
// Useful for poking a running decision service by hand:
//
//   vfsx check open alice /srv file.txt --arg 0 --arg 420
//   vfsx check connect alice /srv

use std::process::ExitCode;

use vfsx_bridge::{Arg, BridgeClient, BridgeConfig, Decision, Operation, OperationDescriptor};

pub fn execute(
    config: &BridgeConfig,
    operation: &str,
    user: &str,
    origin: &str,
    target: Option<&str>,
    args: &[String],
) -> Decision {
    let descriptor = build_descriptor(operation, user, origin, target, args);
    let client = BridgeClient::from_config(config);

    let decision = match client.try_submit(&descriptor) {
        Ok(decision) => decision,
        Err(e) => {
            eprintln!("bridge error ({}): {}", config.socket_path.display(), e);
            Decision::Error
        }
    };
    println!("{}", decision);
    decision
}

pub fn exit_code(decision: Decision) -> ExitCode {
    match decision {
        Decision::Proceed => ExitCode::SUCCESS,
        Decision::Denied => ExitCode::from(1),
        Decision::Error => ExitCode::from(2),
    }
}

/// Build a descriptor from command-line text. Arguments that parse as
/// integers are sent as numbers, everything else as paths.
fn build_descriptor(
    operation: &str,
    user: &str,
    origin: &str,
    target: Option<&str>,
    args: &[String],
) -> OperationDescriptor {
    let mut descriptor = OperationDescriptor::new(Operation::parse(operation), user, origin);
    if let Some(target) = target {
        descriptor = descriptor.with_target(target);
    }
    for arg in args {
        let arg = match arg.parse::<i64>() {
            Ok(n) => Arg::Number(n),
            Err(_) => Arg::Path(arg.clone()),
        };
        descriptor = descriptor.with_arg(arg);
    }
    descriptor
}
