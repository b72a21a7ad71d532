use colored::Colorize;

fn main() {
    if let Err(e) = mlbox::run() {
        eprintln!("{} {e}", "Error:".red().bold());
        for cause in e.chain().skip(1) {
            eprintln!("  {} {cause}", "caused by:".red());
        }
        std::process::exit(1);
    }
}
