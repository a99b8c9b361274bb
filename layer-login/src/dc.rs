//! Telegram data-centre address table.

use std::collections::HashMap;

use layer_tl_types as tl;

/// DC every fresh login starts on.
pub const DEFAULT_DC: i32 = 2;

/// Bootstrap production DC table, used until `help.getConfig` answers.
pub fn default_dc_addresses() -> HashMap<i32, String> {
    [
        (1, "149.154.175.53:443"),
        (2, "149.154.167.51:443"),
        (3, "149.154.175.100:443"),
        (4, "149.154.167.91:443"),
        (5, "91.108.56.130:443"),
    ]
    .into_iter()
    .map(|(id, addr)| (id, addr.to_string()))
    .collect()
}

/// Merge the `dc_options` of a `help.getConfig` reply into `table`.
///
/// Media-only, CDN and TCPO-only endpoints are skipped; IPv6 endpoints are
/// taken only when `allow_ipv6` is set. Returns how many entries were applied.
pub fn merge_config(
    table:      &mut HashMap<i32, String>,
    options:    &[tl::enums::DcOption],
    allow_ipv6: bool,
) -> usize {
    let mut applied = 0;
    for opt in options {
        let tl::enums::DcOption::DcOption(o) = opt;
        if o.media_only || o.cdn || o.tcpo_only { continue; }
        if o.ipv6 && !allow_ipv6 { continue; }
        // Prefer IPv4 when both families are present.
        if allow_ipv6 && o.ipv6 && table.get(&o.id).is_some_and(|a| !a.starts_with('[')) {
            continue;
        }
        let addr = if o.ipv6 {
            format!("[{}]:{}", o.ip_address, o.port)
        } else {
            format!("{}:{}", o.ip_address, o.port)
        };
        table.insert(o.id, addr);
        applied += 1;
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(id: i32, ip: &str, ipv6: bool, media_only: bool) -> tl::enums::DcOption {
        tl::enums::DcOption::DcOption(tl::types::DcOption {
            ipv6,
            media_only,
            tcpo_only:  false,
            cdn:        false,
            r#static:   false,
            this_port_only: false,
            id,
            ip_address: ip.into(),
            port:       443,
            secret:     None,
        })
    }

    #[test]
    fn bootstrap_table_has_five_dcs() {
        let t = default_dc_addresses();
        assert_eq!(t.len(), 5);
        assert_eq!(t[&DEFAULT_DC], "149.154.167.51:443");
    }

    #[test]
    fn merge_skips_media_and_ipv6() {
        let mut t = default_dc_addresses();
        let n = merge_config(&mut t, &[
            opt(4, "10.0.0.4", false, false),
            opt(2, "10.0.0.2", false, true),
            opt(1, "2001:db8::1", true, false),
        ], false);
        assert_eq!(n, 1);
        assert_eq!(t[&4], "10.0.0.4:443");
        assert_eq!(t[&2], "149.154.167.51:443");
        assert_eq!(t[&1], "149.154.175.53:443");
    }

    #[test]
    fn merge_takes_ipv6_when_allowed_and_no_ipv4() {
        let mut t = HashMap::new();
        merge_config(&mut t, &[opt(7, "2001:db8::7", true, false)], true);
        assert_eq!(t[&7], "[2001:db8::7]:443");
    }
}
