use rtport_io::{MidiSystem, PortInfo};

fn print_ports(title: &str, ports: &[PortInfo]) {
    println!("\n=== {} ===", title);
    if ports.is_empty() {
        println!("  (none found)");
    }
    for info in ports {
        println!("  [{}] {}", info.number(), info.name());
    }
}

fn main() -> rtport_io::Result<()> {
    tracing_subscriber::fmt::init();

    let midi = MidiSystem::builder().build()?;

    println!("=== MIDI APIs ({} backend) ===", midi.backend_name());
    for api in midi.compiled_apis() {
        println!("  {} ({})", api.display_name(), api.name());
    }
    println!("  virtual ports: {}", midi.supports_virtual_ports());

    print_ports("Readable Ports", &midi.readable_ports()?);
    print_ports("Writable Ports", &midi.writable_ports()?);
    Ok(())
}
