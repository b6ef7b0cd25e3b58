fn main() -> anyhow::Result<()> {
    milelog_lib::run()
}
