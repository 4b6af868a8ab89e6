use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = castline::Args::parse();
    castline::init_logging(args.log_json);
    castline::run(args)
}
