//! HttpTask CLI - Command-line interface for single HTTP requests

use clap::{Args, Parser, Subcommand};
use httptask::tasks::{self, Task};
use httptask::{
    AuthMode, FetchEngine, FetchOutcome, GitPulls, GitUser, Hooks, HttpMethod, Param, Progress,
    Properties, RequestDescriptor, UploadBody, DEFAULT_BLOCK_SIZE_KB,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// HttpTask - configurable single-request HTTP fetch tool
#[derive(Parser, Debug)]
#[command(name = "httptask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Only log warnings and errors; no progress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Custom User-Agent
    #[arg(long, global = true)]
    user_agent: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Perform one request and print the outcome as JSON
    Fetch {
        /// URL to fetch
        url: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET", value_parser = parse_method)]
        method: HttpMethod,

        /// Send parameters as a form body instead of in the URL
        #[arg(long)]
        form: bool,

        /// Request body (switches to upload mode)
        #[arg(long, short = 'd', conflicts_with = "form")]
        data: Option<String>,

        /// Content type of --data
        #[arg(long, default_value = "text/plain")]
        content_type: String,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// List patch URLs of a GitHub repository's open pull requests
    Pulls {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,

        /// GitHub API root
        #[arg(long, default_value = tasks::GITHUB_API_ROOT)]
        api_root: String,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Fetch the authenticated GitHub user
    User {
        /// GitHub API root
        #[arg(long, default_value = tasks::GITHUB_API_ROOT)]
        api_root: String,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Run a request described by a JSON file
    Run {
        /// Path to a JSON request descriptor
        descriptor: PathBuf,

        /// Send parameters as a form body instead of in the URL
        #[arg(long)]
        form: bool,
    },
    /// Print the JSON schema of request descriptors
    Schema,
}

/// Settings shared by every request subcommand
#[derive(Args, Debug)]
struct RequestArgs {
    /// Request parameter (repeatable)
    #[arg(long = "param", short = 'p', value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<Param>,

    /// Request header (repeatable)
    #[arg(long = "header", short = 'H', value_name = "NAME: VALUE", value_parser = parse_header)]
    headers: Vec<Param>,

    /// Username; enables basic authentication
    #[arg(long, short)]
    user: Option<String>,

    #[arg(long)]
    password: Option<String>,

    /// Authentication mode (none, basic, digest)
    #[arg(long, value_parser = parse_auth)]
    auth: Option<AuthMode>,

    /// Save the body to this file
    #[arg(long, short = 'o')]
    dest: Option<PathBuf>,

    /// Expose the body as this property in the output
    #[arg(long)]
    property: Option<String>,

    /// Property set to "true" on success
    #[arg(long)]
    success_property: Option<String>,

    /// Only download when newer than --dest, and stamp --dest with the remote time
    #[arg(long)]
    timestamp: bool,

    /// Allow cached responses
    #[arg(long)]
    use_caches: bool,

    /// Report failures in the output instead of exiting non-zero
    #[arg(long)]
    no_fail: bool,

    /// Do not treat non-2xx status codes as failures
    #[arg(long)]
    ignore_status: bool,

    /// Transfer block size in KiB
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE_KB)]
    block_size: usize,
}

impl RequestArgs {
    fn apply(self, mut request: RequestDescriptor) -> RequestDescriptor {
        for param in self.params {
            request = request.param(param.name, param.value);
        }
        for header in self.headers {
            request = request.header(header.name, header.value);
        }
        if let Some(user) = self.user {
            request = request.username(user);
        }
        if let Some(password) = self.password {
            request = request.password(password);
        }
        if let Some(auth) = self.auth {
            request = request.auth(auth);
        }
        if let Some(dest) = self.dest {
            request = request.dest_file(dest);
        }
        if let Some(property) = self.property {
            request = request.dest_property(property);
        }
        if let Some(name) = self.success_property {
            request = request.success_property(name);
        }
        request
            .use_timestamp(self.timestamp)
            .use_caches(self.use_caches)
            .fail_on_error(!self.no_fail)
            .use_response_code(!self.ignore_status)
            .block_size_kb(self.block_size)
    }
}

/// Request built from flags or a descriptor file
struct Custom {
    request: RequestDescriptor,
    form: bool,
}

impl Task for Custom {
    fn name(&self) -> &'static str {
        "custom"
    }

    fn descriptor(&self) -> RequestDescriptor {
        self.request.clone()
    }

    fn hooks(&self) -> Hooks {
        Hooks::new().params_in_url(!self.form)
    }
}

fn parse_param(s: &str) -> Result<Param, String> {
    Param::parse(s).ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))
}

fn parse_header(s: &str) -> Result<Param, String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'NAME: VALUE', got '{s}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in '{s}'"));
    }
    Ok(Param::new(name, value.trim()))
}

fn parse_method(s: &str) -> Result<HttpMethod, String> {
    s.parse().map_err(|_| format!("unsupported method '{s}'"))
}

fn parse_auth(s: &str) -> Result<AuthMode, String> {
    s.parse().map_err(|_| format!("unknown auth mode '{s}'"))
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let verbose = !cli.quiet;
    let user_agent = cli.user_agent;

    let task: Box<dyn Task> = match cli.command {
        Commands::Fetch {
            url,
            method,
            form,
            data,
            content_type,
            request,
        } => {
            let mut descriptor = request.apply(RequestDescriptor::new(url).method(method));
            if let Some(data) = data {
                descriptor = descriptor.body(UploadBody::new(content_type, data));
            }
            Box::new(Custom {
                request: descriptor.verbose(verbose),
                form,
            })
        }
        Commands::Pulls {
            owner,
            repo,
            api_root,
            request,
        } => Box::new(
            GitPulls::new(owner, repo)
                .api_root(api_root)
                .configure(|r| request.apply(r).verbose(verbose)),
        ),
        Commands::User { api_root, request } => Box::new(
            GitUser::new()
                .api_root(api_root)
                .configure(|r| request.apply(r).verbose(verbose)),
        ),
        Commands::Run { descriptor, form } => match load_descriptor(&descriptor) {
            Ok(request) => Box::new(Custom { request, form }),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Schema => {
            let schema = schemars::schema_for!(RequestDescriptor);
            writeln_safe(&to_json(&schema));
            return;
        }
    };

    std::process::exit(run(task.as_ref(), user_agent).await);
}

fn load_descriptor(path: &Path) -> Result<RequestDescriptor, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid descriptor {}: {}", path.display(), e))
}

async fn run(task: &dyn Task, user_agent: Option<String>) -> i32 {
    let mut builder = FetchEngine::builder();
    if let Some(ua) = user_agent {
        builder = builder.user_agent(ua);
    }

    let mut properties = Properties::new();
    let result = tasks::run_with_progress(task, builder, &mut properties, |p| {
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "{}", progress_mark(&p));
        let _ = stderr.flush();
    })
    .await;

    match result {
        Ok(outcome) => {
            for (name, value) in properties.iter() {
                tracing::debug!(property = name, bytes = value.len(), "Property set");
            }
            writeln_safe(&format_report(&outcome, &properties));
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

/// Character printed for a progress event
fn progress_mark(progress: &Progress) -> &'static str {
    match progress {
        Progress::Uploaded { .. } => "^",
        Progress::Downloaded { .. } => ".",
        Progress::Finished { .. } => "\n",
    }
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    outcome: &'a FetchOutcome,
    #[serde(skip_serializing_if = "no_properties")]
    properties: &'a Properties,
}

fn no_properties(properties: &&Properties) -> bool {
    properties.is_empty()
}

/// Format the outcome and any properties as pretty JSON
fn format_report(outcome: &FetchOutcome, properties: &Properties) -> String {
    to_json(&Report {
        outcome,
        properties,
    })
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    })
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptask::FORM_CONTENT_TYPE;

    fn request_args(args: &[&str]) -> RequestDescriptor {
        let mut argv = vec!["httptask", "fetch", "http://localhost/"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Fetch {
                url,
                method,
                request,
                ..
            } => request.apply(RequestDescriptor::new(url).method(method)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_defaults_match_descriptor() {
        let request = request_args(&[]);
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.fail_on_error);
        assert!(request.use_response_code);
        assert!(!request.use_caches);
        assert!(!request.use_timestamp);
        assert_eq!(request.block_size_kb, DEFAULT_BLOCK_SIZE_KB);
    }

    #[test]
    fn test_flags_applied() {
        let request = request_args(&[
            "-X",
            "post",
            "-p",
            "q=rust",
            "-H",
            "X-Token: abc",
            "--user",
            "u",
            "--password",
            "p",
            "--property",
            "body",
            "--no-fail",
            "--ignore-status",
            "--block-size",
            "8",
        ]);
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.params, vec![Param::new("q", "rust")]);
        assert_eq!(request.headers, vec![Param::new("X-Token", "abc")]);
        assert_eq!(request.auth, AuthMode::Basic);
        assert_eq!(request.dest_property.as_deref(), Some("body"));
        assert!(!request.fail_on_error);
        assert!(!request.use_response_code);
        assert_eq!(request.block_size(), 8 * 1024);
    }

    #[test]
    fn test_rejects_malformed_values() {
        assert!(Cli::try_parse_from(["httptask", "fetch", "u", "-p", "novalue"]).is_err());
        assert!(Cli::try_parse_from(["httptask", "fetch", "u", "-H", "NoColon"]).is_err());
        assert!(Cli::try_parse_from(["httptask", "fetch", "u", "-X", "BREW"]).is_err());
        assert!(Cli::try_parse_from(["httptask", "fetch", "u", "--auth", "ntlm"]).is_err());
    }

    #[test]
    fn test_parse_header_trims() {
        assert_eq!(
            parse_header("Accept :  text/html").unwrap(),
            Param::new("Accept", "text/html")
        );
        assert_eq!(
            parse_header("X-Url: http://a/b").unwrap(),
            Param::new("X-Url", "http://a/b")
        );
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_form_hooks() {
        let task = Custom {
            request: RequestDescriptor::new("http://localhost/"),
            form: true,
        };
        assert!(!task.hooks().adds_params_to_url());
        assert_eq!(FORM_CONTENT_TYPE, "application/x-www-form-urlencoded");
    }

    #[test]
    fn test_progress_marks() {
        assert_eq!(progress_mark(&Progress::Uploaded { block: 1, total: 1 }), "^");
        assert_eq!(
            progress_mark(&Progress::Downloaded {
                block: 1,
                total: 1,
                expected: None
            }),
            "."
        );
        assert_eq!(progress_mark(&Progress::Finished { total: 1 }), "\n");
    }

    #[test]
    fn test_format_report() {
        let outcome = FetchOutcome {
            url: "https://example.com/".to_string(),
            succeeded: true,
            status_code: Some(200),
            bytes_transferred: 5,
            ..Default::default()
        };
        let mut properties = Properties::new();

        let output = format_report(&outcome, &properties);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["succeeded"], true);
        assert!(json.get("properties").is_none());

        properties.set("body", "hello");
        let output = format_report(&outcome, &properties);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["properties"]["body"], "hello");
    }

    #[test]
    fn test_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"url": "http://localhost/x", "method": "HEAD", "fail_on_error": false}"#,
        )
        .unwrap();
        let request = load_descriptor(&path).unwrap();
        assert_eq!(request.method, HttpMethod::Head);
        assert!(!request.fail_on_error);
        assert!(request.verbose);

        std::fs::write(&path, "{").unwrap();
        assert!(load_descriptor(&path).unwrap_err().starts_with("Invalid descriptor"));
    }
}
