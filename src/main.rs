use anyhow::{anyhow, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use postsplice::config::{Config, API_KEY_VARIABLE};
use postsplice::exit_codes;
use postsplice::layout::extract_layout_with;
use postsplice::publish::{backend, publish, require_api_key, Options, Outcome};
use postsplice::write::SitemapPlan;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing::error;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let project_arg = || {
        Arg::with_name("project")
            .long("project")
            .short("p")
            .takes_value(true)
            .help("Directory to start searching for postsplice.yaml from (default: current directory)")
    };

    let matches = App::new("postsplice")
        .about("Generates a blog post and splices it into a static site")
        .version(env!("CARGO_PKG_VERSION"))
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("generate")
                .about("Requests a post and writes the page, post index, and sitemap")
                .arg(project_arg())
                .arg(
                    Arg::with_name("on-collision")
                        .long("on-collision")
                        .takes_value(true)
                        .possible_values(&["overwrite", "reject", "suffix"])
                        .help("What to do if a page already exists for the slug"),
                )
                .arg(
                    Arg::with_name("response")
                        .long("response")
                        .takes_value(true)
                        .help("Replay a saved backend response instead of calling the backend"),
                )
                .arg(
                    Arg::with_name("dry-run")
                        .long("dry-run")
                        .help("Show what would be written without writing it"),
                ),
        )
        .subcommand(
            SubCommand::with_name("layout")
                .about("Checks that the template page can be split into header and footer")
                .arg(project_arg()),
        )
        .get_matches();

    let code = match matches.subcommand() {
        ("generate", Some(matches)) => generate(matches),
        ("layout", Some(matches)) => layout(matches),
        _ => exit_codes::USAGE_ERROR,
    };
    exit(code);
}

fn load_config(matches: &ArgMatches) -> Result<Config> {
    let dir = match matches.value_of("project") {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };
    if !dir.is_dir() {
        return Err(anyhow!("`{}` is not a directory", dir.display()));
    }
    Config::from_directory(&dir)
}

fn generate(matches: &ArgMatches) -> i32 {
    // A missing `.env` file is normal.
    let _ = dotenvy::dotenv();

    let response = matches.value_of("response").map(Path::new);
    let api_key = std::env::var(API_KEY_VARIABLE).ok();
    if response.is_none() {
        if let Err(e) = require_api_key(api_key.as_deref()) {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    }

    let config = match load_config(matches) {
        Ok(config) => config.with_api_key(api_key),
        Err(e) => {
            error!("{:#}", e);
            return exit_codes::USAGE_ERROR;
        }
    };

    let on_collision = match matches.value_of("on-collision") {
        // `possible_values` has already validated the flag.
        Some(policy) => policy.parse().unwrap_or(config.on_collision),
        None => config.on_collision,
    };
    let options = Options {
        on_collision,
        dry_run: matches.is_present("dry-run"),
    };

    let generator = match backend(&config, response) {
        Ok(generator) => generator,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };

    let today = chrono::Local::now().date_naive();
    match publish(&config, generator.as_ref(), &options, today) {
        Ok(Outcome::Written(result)) => {
            println!("Created new blog post `{}`", result.slug);
            println!("{}", result);
            exit_codes::SUCCESS
        }
        Ok(Outcome::DryRun(staged)) => {
            println!("Dry run for `{}`; nothing was written", staged.post.slug);
            println!("page:    would write {}", staged.page.path.display());
            println!("index:   would write {}", staged.index.path.display());
            match &staged.sitemap {
                SitemapPlan::Write(file) => {
                    println!("sitemap: would write {}", file.path.display())
                }
                SitemapPlan::Skip(reason) => println!("sitemap: would skip ({})", reason),
            }
            match serde_json::to_string_pretty(&staged.post) {
                Ok(post) => println!("{}", post),
                Err(e) => error!("serializing post: {}", e),
            }
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let postsplice::publish::Error::Generation(
                postsplice::generate::Error::Malformed { text, .. },
            ) = &e
            {
                eprintln!("Response text: {}", text);
            }
            e.exit_code()
        }
    }
}

fn layout(matches: &ArgMatches) -> i32 {
    let config = match load_config(matches) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return exit_codes::USAGE_ERROR;
        }
    };
    let template = match std::fs::read_to_string(&config.template_file) {
        Ok(template) => template,
        Err(e) => {
            eprintln!(
                "Error: reading template file `{}`: {}",
                config.template_file.display(),
                e
            );
            return exit_codes::PRECONDITION_FAILURE;
        }
    };
    match extract_layout_with(&template, &config.markers) {
        Ok(layout) => {
            println!("template: {}", config.template_file.display());
            println!("header:   {} bytes", layout.header.len());
            println!("footer:   {} bytes", layout.footer.len());
            exit_codes::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::LAYOUT_FAILURE
        }
    }
}
