use colored::Colorize;
use json_mapper::cli;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.init_tracing();
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
