mod cli;
mod commands;

fn main() -> anyhow::Result<()> {
    crate::cli::run()
}
