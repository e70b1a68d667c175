/// Flattens full type names for the merged file.
///
/// `.pkg.Outer.Inner` with `pkg` omitted becomes `Outer_Inner`. The omitted
/// package is matched as a plain string prefix.
#[derive(Debug, Clone, Copy)]
pub struct Qualifier<'a> {
    omit_package: &'a str,
}

impl<'a> Qualifier<'a> {
    pub fn new(omit_package: &'a str) -> Self {
        Self { omit_package }
    }

    pub fn qualify(&self, name: &str) -> String {
        let name = name.strip_prefix('.').unwrap_or(name);
        let name = match name.strip_prefix(self.omit_package) {
            Some(rest) => rest.strip_prefix('.').unwrap_or(rest),
            None => name,
        };
        name.replace('.', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_omitted_package_and_flattens() {
        let q = Qualifier::new("pkg");
        assert_eq!(q.qualify(".pkg.Resp.Inner"), "Resp_Inner");
        assert_eq!(q.qualify("pkg.Req"), "Req");
        assert_eq!(q.qualify("other.Thing"), "other_Thing");
    }

    #[test]
    fn nested_package_prefix() {
        let q = Qualifier::new("com.example");
        assert_eq!(q.qualify("com.example.api.User"), "api_User");
        assert_eq!(q.qualify(".com.other.User"), "com_other_User");
    }

    #[test]
    fn empty_prefix_only_replaces_dots() {
        let q = Qualifier::new("");
        assert_eq!(q.qualify(".a.b.C"), "a_b_C");
        assert_eq!(q.qualify("Plain"), "Plain");
    }
}
