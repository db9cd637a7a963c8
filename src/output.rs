use ado_connector::router::ConnectorResponse;
use console::style;

fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

fn bright_red(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().red()
}

fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Prints the banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔌 ado-connector"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Azure DevOps pipelines connector")
    );
}

/// Prints the status line to stderr.
pub fn print_status(method: &str, path: &str, response: &ConnectorResponse) {
    let status = response.status.to_string();
    let status = if response.status.is_success() {
        bright_green(status)
    } else {
        bright_red(status)
    };
    eprintln!("{} {} {}", dim(method), dim(path), status);
}

/// Serializes the envelope body.
pub fn render(response: &ConnectorResponse, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(&response.body)
    } else {
        serde_json::to_string(&response.body)
    }
}
