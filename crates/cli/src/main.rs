fn main() -> std::process::ExitCode {
    leadbot_cli::run()
}
