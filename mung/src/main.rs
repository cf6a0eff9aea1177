use clap::Parser;

use mung::run_svg::{run_find_svg, SvgArgs};

fn main() -> anyhow::Result<()> {
    let args = SvgArgs::parse();
    run_find_svg(args)
}
