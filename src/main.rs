fn main() {
    burn_events::cli::run();
}
