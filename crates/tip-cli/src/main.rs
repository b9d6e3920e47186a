fn main() -> Result<(), Box<dyn std::error::Error>> {
    tip_cli::main(std::env::args().collect())
}
