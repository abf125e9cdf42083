use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use ipconfd_agent::{link_local_address, parse_hardware_address, LINK_LOCAL_PREFIX};

#[derive(Parser, Debug)]
pub struct LinkLocalArgs {
    /// Hardware address, e.g. 02:42:ac:11:00:02
    pub mac: String,
}

pub fn run_link_local(args: LinkLocalArgs) -> Result<()> {
    let mac = parse_hardware_address(&args.mac)
        .ok_or_else(|| eyre!("not a hardware address: {}", args.mac))?;
    println!("{}/{}", link_local_address(&mac), LINK_LOCAL_PREFIX);
    Ok(())
}
