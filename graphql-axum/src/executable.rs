//! Main entry point for CLI command to start a server.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::configuration::Configuration;
use crate::configuration::generate_config_schema;
use crate::handler::GraphQLApp;

/// Options for the server
#[derive(Parser, Debug)]
#[command(name = "graphql-axum", about = "GraphQL server with multipart file uploads")]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace).
    #[arg(
        long = "log",
        default_value = "info",
        alias = "log-level",
        env = "GRAPHQL_AXUM_LOG"
    )]
    log_level: String,

    /// Configuration location relative to the project directory.
    #[arg(short, long = "config", env = "GRAPHQL_AXUM_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Prints the configuration schema.
    #[arg(long)]
    schema: bool,
}

/// Entry point into creating a server executable.
pub struct Executable {}

#[buildstructor::buildstructor]
impl Executable {
    /// Parse the command line, set up logging and serve `app` until ctrl-c.
    ///
    /// ```ignore
    /// Executable::builder()
    ///     .app(GraphQLApp::new(executor))
    ///     .start()
    ///     .await
    /// ```
    /// Must be called from within a tokio runtime.
    #[builder(entry = "builder", exit = "start")]
    pub async fn start(app: GraphQLApp) -> Result<()> {
        let opt = Opt::parse();

        if opt.schema {
            let schema = generate_config_schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            return Ok(());
        }

        let subscriber = subscriber(&opt.log_level)?;
        tracing::subscriber::set_global_default(subscriber)
            .context("could not set the global tracing subscriber")?;

        let configuration = match &opt.config_path {
            Some(path) => {
                let path = if path.is_relative() {
                    std::env::current_dir()?.join(path)
                } else {
                    path.clone()
                };
                Configuration::from_file(&path)?
            }
            None => Configuration::default(),
        };

        if let Err(err) = serve(app, configuration).await {
            tracing::error!("{}", err);
            return Err(err);
        }
        Ok(())
    }
}

fn subscriber(log_level: &str) -> Result<Box<dyn Subscriber + Send + Sync>> {
    let builder = tracing_subscriber::fmt::fmt().with_env_filter(
        EnvFilter::try_new(log_level).context("could not parse log configuration")?,
    );

    Ok(if std::io::stdout().is_terminal() {
        Box::new(builder.finish())
    } else {
        Box::new(builder.json().finish())
    })
}

async fn serve(app: GraphQLApp, configuration: Configuration) -> Result<()> {
    let router = app.router(&configuration);
    let listener = tokio::net::TcpListener::bind(configuration.server.listen)
        .await
        .with_context(|| format!("could not listen on {}", configuration.server.listen))?;

    tracing::info!(
        "GraphQL endpoint exposed at http://{}{}",
        listener.local_addr()?,
        configuration.server.path
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::error!("could not listen for ctrl-c: {}", err);
            std::future::pending::<()>().await
        }
    }
}
