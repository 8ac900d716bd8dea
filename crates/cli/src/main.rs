fn main() {
    if let Err(error) = xforms_cli::run() {
        // run() installs the subscriber once arguments are parsed; earlier failures exit through clap.
        tracing::error!(error = format!("{error:#}"), "xforms-cli failed");
        std::process::exit(xforms_cli::exit_code(&error));
    }
}
