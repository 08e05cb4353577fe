use crate::pipeline::executor::Pipeline;

/// Prints the per-layer table of the most recent run.
pub fn print_pipeline_stats(pipeline: &Pipeline) {
    println!("\nPipeline Statistics");
    println!("===================");
    println!(
        "\nWeight capacity: {} elements",
        pipeline.config().weight_capacity
    );
    println!("Phase: {:?}", pipeline.phase());

    let trace = pipeline.trace();
    if trace.is_empty() {
        println!("Warning: no completed run to report");
        return;
    }

    println!("\nLayer Details:");
    println!("{:-<125}", "");
    println!(
        "{:<4} {:<10} {:<9} {:<11} {:<14} {:<14} {:<10} {:<6} {}",
        "ID", "Layer", "Type", "Memory", "Input Shape", "Output Shape", "Buffers", "Tiles", "Config"
    );
    println!("{:-<125}", "");

    let mut total_bytes = 0u64;
    let mut total_tiles = 0usize;
    let mut total_weights = 0usize;
    for s in trace {
        let memory = s.output.size_in_bytes() as u64;
        total_bytes += memory;
        total_tiles += s.tiles;
        total_weights += s.weight_elements;
        println!(
            "{:<4} {:<10} {:<9} {:<11} {:<14} {:<14} {:<10} {:<6} {}",
            s.index,
            s.label,
            s.kind,
            format_memory_mb(memory),
            format_dimensions(&s.input.to_dims()),
            format_dimensions(&s.output.to_dims()),
            format!("{}→{}", s.input_buffer, s.output_buffer),
            s.tiles,
            s.config,
        );
    }
    println!("{:-<125}", "");
    println!(
        "Activation memory (sum of layer outputs): {}",
        format_memory_mb(total_bytes)
    );
    println!("Weight elements: {}", total_weights);
    println!("Weight tiles executed: {}", total_tiles);
}

fn format_memory_mb(bytes: u64) -> String {
    format!("{:.2} MiB", bytes as f64 / (1024.0 * 1024.0))
}

fn format_dimensions(dims: &[usize]) -> String {
    dims.iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("×")
}
