use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = flagstate_query::Args::parse();

	flagstate_query::run(args).await
}
