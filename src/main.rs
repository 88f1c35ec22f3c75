use anyhow::Result;

fn main() -> Result<()> {
    scrub_cli::run_cli()
}
