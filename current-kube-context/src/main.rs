use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use costkube::{extract_auth, load_kubeconfig, resolve_path};
use tracing_subscriber::EnvFilter;

/// Show which context, cluster and credentials a kubeconfig selects.
#[derive(Parser)]
struct Args {
    /// Kubeconfig to inspect; defaults to $KUBECONFIG, then ~/.kube/config
    kubeconfig: Option<PathBuf>,
}

fn present(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let path = resolve_path(args.kubeconfig.as_deref())?;
    let kube_config = load_kubeconfig(Some(&path))?;

    let context = kube_config
        .context(&kube_config.current_context)
        .context("No matching context found")?;

    println!("kubeconfig: {}", path.display());
    println!("context:    {}", context.name);
    match &context.context.namespace {
        Some(ns) => println!("namespace:  {ns}"),
        None => println!("namespace:  No namespace"),
    }
    println!("cluster:    {}", context.context.cluster);
    println!("user:       {}", context.context.user);

    let mut auth = extract_auth(&kube_config)?;
    println!("server:     {}", auth.server_url);
    println!("insecure:   {}", present(auth.insecure_skip));
    println!("ca:         {}", present(auth.ca_data.is_some()));
    println!("client tls: {}", present(auth.has_client_identity()));
    println!("token:      {}", present(auth.token.is_some()));
    println!("basic auth: {}", present(auth.basic.is_some()));
    auth.secure_cleanup();

    Ok(())
}
