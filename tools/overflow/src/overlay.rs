//! Device-tree overlay fragments that override memory node sizes.

use crate::MemoryRegion;

/// Renders an overlay fragment setting the `reg` of the node labelled `node`.
///
/// `base` is emitted as given, so it keeps whatever notation the source used.
pub fn render_overlay(node: &str, base: &str, size: u64) -> String {
    format!("&{node} {{\n\treg = <{base} {size:#x}>;\n}};\n")
}

/// Renders one overlay covering every region at its current size.
pub fn render_regions<'a>(regions: impl IntoIterator<Item = &'a MemoryRegion>) -> String {
    let mut text = String::new();
    for r in regions {
        text.push_str(&render_overlay(&r.node_name, &r.base, r.current_size));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_node() {
        assert_eq!(
            render_overlay("sram0", "0x20000000", 0x2000),
            "&sram0 {\n\treg = <0x20000000 0x2000>;\n};\n",
        );
    }

    #[test]
    fn decimal_base_stays_decimal() {
        assert_eq!(
            render_overlay("sram0", "4096", 0x2000),
            "&sram0 {\n\treg = <4096 0x2000>;\n};\n",
        );
    }

    #[test]
    fn several_nodes() {
        let regions = [
            MemoryRegion {
                logical_name: "FLASH".to_string(),
                node_name: "flash0".to_string(),
                base: "0x8000000".to_string(),
                original_size: 0x10000,
                current_size: 0x12000,
            },
            MemoryRegion {
                logical_name: "RAM".to_string(),
                node_name: "sram0".to_string(),
                base: "0x20000000".to_string(),
                original_size: 0x1000,
                current_size: 0x2000,
            },
        ];
        let text = render_regions(&regions);
        assert_eq!(text, "\
&flash0 {
\treg = <0x8000000 0x12000>;
};
&sram0 {
\treg = <0x20000000 0x2000>;
};
");
    }
}
