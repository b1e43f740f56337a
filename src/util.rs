//! Stateless helpers for building test inputs.

use rand::RngCore;

/// Log `data` as `label[len]: hex`.
pub fn print_hex(label: &str, data: &[u8]) {
    tracing::info!("{}[{}]: {}", label, data.len(), hex::encode(data));
}

/// `len` bytes of throwaway test input. Not a security primitive.
pub fn random(len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

/// Concatenate multi-part inputs in order.
pub fn coalesce_inputs<T: AsRef<[u8]>>(inputs: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(inputs.iter().map(|i| i.as_ref().len()).sum());
    for input in inputs {
        out.extend_from_slice(input.as_ref());
    }
    out
}

/// Total length of a multi-part input.
pub fn coalesce_input_sizes(sizes: &[usize]) -> usize {
    sizes.iter().sum()
}
