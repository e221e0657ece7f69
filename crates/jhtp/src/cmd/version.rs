use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("jhtp {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("protocol version: {}", jhtp_frame::PROTOCOL_VERSION);
        if let Some(target) = option_env!("JHTP_BUILD_TARGET") {
            println!("target: {target}");
        }
    }
    Ok(SUCCESS)
}
