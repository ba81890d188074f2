fn main() -> anyhow::Result<()> {
    stillpoint_lib::run()
}
