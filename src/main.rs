use std::io::Write;

use sems_mitm_exporter::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    let default_filter = if options.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .init();

    match options.command {
        Command::Serve {
            batsignal,
            sems_passthrough,
        } => sems_mitm_exporter::serve(batsignal, sems_passthrough).await,
        Command::Version => sems_mitm_exporter::print_version(),
    }
}
