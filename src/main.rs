fn main() {
    let command_line_interface = declgen::cli::CommandLineInterface::load();
    command_line_interface.run();
}
