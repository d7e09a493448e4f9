/// Toolchain location written by `espresso init`
pub const DEFAULT_TOOLCHAIN_PATH: &str = "${JAVA_HOME}";

pub const DEFAULT_REGISTRY_NAME: &str = "espresso-registry";

pub const DEFAULT_REGISTRY_URL: &str =
    "https://github.com/Kerosene-Labs/espresso-registry/archive/refs/heads/main.zip";

/// Source written by `espresso init` for `<base_package>.Main`
pub(crate) fn main_class_source(base_package: &str) -> String {
    format!(
        "package {base_package};\n\npublic class Main {{\n    public static void main(String[] args) {{\n        System.out.println(\"Hello, world!\");\n    }}\n}}\n"
    )
}
