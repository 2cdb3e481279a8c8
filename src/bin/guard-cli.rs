use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use endpoint_guard::config::{load_config, GuardConfig};
use endpoint_guard::endpoint::{echo_handler, EndpointRegistry};
use endpoint_guard::security::{
    AccessChecker, HttpRequestContext, Principal, CSRF_HEADER,
};
use endpoint_guard::session::{Session, CSRF_SESSION_ATTRIBUTE};

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Inspect and test endpoint access configuration offline", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "guard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,
    /// List every method with the target whose markers govern it
    Targets,
    /// Evaluate a simulated call
    Check {
        #[arg(long)]
        endpoint: String,

        #[arg(long)]
        method: String,

        /// Call as this configured user (anonymous if omitted).
        #[arg(long)]
        user: Option<String>,

        /// CSRF token stored in the caller's session.
        #[arg(long, conflicts_with = "empty_session")]
        session_token: Option<String>,

        /// Caller has a session that holds no CSRF token.
        #[arg(long)]
        empty_session: bool,

        /// Value of the X-CSRF-Token header.
        #[arg(long)]
        csrf_token: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let registry = EndpointRegistry::from_config(&config.endpoints, echo_handler());

    let output = match cli.command {
        Commands::Validate => json!({
            "valid": true,
            "endpoints": registry.len(),
            "users": config.users.len(),
        }),
        Commands::Targets => list_targets(&registry),
        Commands::Check {
            endpoint,
            method,
            user,
            session_token,
            empty_session,
            csrf_token,
        } => {
            let call = SimulatedCall {
                user,
                session_token,
                empty_session,
                csrf_token,
            };
            check_call(&config, &registry, &endpoint, &method, call)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn list_targets(registry: &EndpointRegistry) -> Value {
    let checker = AccessChecker::default();
    let mut rows = Vec::new();
    for endpoint in registry.endpoints() {
        for target in endpoint.method_refs() {
            let row = match checker.security_target(target) {
                Ok(resolved) => json!({
                    "method": target.qualified_name(),
                    "target": resolved.level(),
                    "annotations": resolved.annotations(),
                }),
                Err(e) => json!({
                    "method": target.qualified_name(),
                    "error": e.to_string(),
                }),
            };
            rows.push(row);
        }
    }
    Value::Array(rows)
}

struct SimulatedCall {
    user: Option<String>,
    session_token: Option<String>,
    empty_session: bool,
    csrf_token: Option<String>,
}

fn check_call(
    config: &GuardConfig,
    registry: &EndpointRegistry,
    endpoint: &str,
    method: &str,
    call: SimulatedCall,
) -> Result<Value, Box<dyn std::error::Error>> {
    let target = registry
        .method(endpoint, method)
        .ok_or_else(|| format!("unknown endpoint method '{endpoint}.{method}'"))?;

    let mut builder = Request::builder();
    if let Some(token) = &call.csrf_token {
        builder = builder.header(CSRF_HEADER, token.as_str());
    }
    let mut request = builder.body(Body::empty())?;

    if let Some(name) = &call.user {
        let user = config
            .users
            .iter()
            .find(|u| &u.name == name)
            .ok_or_else(|| format!("unknown user '{name}'"))?;
        request
            .extensions_mut()
            .insert(Principal::new(user.name.clone(), user.roles.iter().cloned()));
    }

    if call.empty_session || call.session_token.is_some() {
        let session = Session::new("cli");
        if let Some(token) = &call.session_token {
            session.set_attribute(CSRF_SESSION_ATTRIBUTE, token.as_str());
        }
        request.extensions_mut().insert(Arc::new(session));
    }

    let checker = AccessChecker::new(config.security.checker_config());
    let ctx = HttpRequestContext::from_request(&request);
    let verdict = checker.check(target, &ctx)?;
    let resolved = checker.security_target(target)?;

    Ok(json!({
        "method": target.qualified_name(),
        "caller": call.user.as_deref().unwrap_or("anonymous"),
        "target": resolved.level(),
        "annotations": resolved.annotations(),
        "csrf": checker.csrf().check(&ctx),
        "allowed": verdict.is_allowed(),
        "message": verdict.denial_message(),
    }))
}
