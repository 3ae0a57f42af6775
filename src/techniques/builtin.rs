//! Builtin technique table. Every entry is pure data consumed by
//! [`Technique::apply`](super::Technique::apply); extending coverage means
//! adding rows here.

use super::{Category, HttpMethod, Mutation, Signal, Technique};

macro_rules! technique {
    ($id:literal, $name:literal, $cat:ident, [$($mutation:expr),* $(,)?]) => {
        technique!($id, $name, $cat, [$($mutation),*], Signal::None)
    };
    ($id:literal, $name:literal, $cat:ident, [$($mutation:expr),* $(,)?], $signal:expr) => {
        Technique {
            id: $id,
            name: $name,
            category: Category::$cat,
            mutations: &[$($mutation),*],
            signal: $signal,
        }
    };
}

pub static BUILTIN: &[Technique] = &[
    // Host header manipulation
    technique!(
        "host-localhost",
        "Host header: localhost",
        Header,
        [Mutation::SetHeader("Host", "localhost")]
    ),
    technique!(
        "host-loopback",
        "Host header: 127.0.0.1",
        Header,
        [Mutation::SetHeader("Host", "127.0.0.1")]
    ),
    technique!(
        "host-port-80",
        "Host header: origin host with :80",
        Header,
        [Mutation::SetHeader("Host", "{host}:80")]
    ),
    technique!(
        "host-port-443",
        "Host header: origin host with :443",
        Header,
        [Mutation::SetHeader("Host", "{host}:443")]
    ),
    // Forwarded-for spoofing
    technique!(
        "xff-loopback",
        "X-Forwarded-For: 127.0.0.1",
        Header,
        [Mutation::SetHeader("X-Forwarded-For", "127.0.0.1")]
    ),
    technique!(
        "xff-any",
        "X-Forwarded-For: 0.0.0.0",
        Header,
        [Mutation::SetHeader("X-Forwarded-For", "0.0.0.0")]
    ),
    technique!(
        "xff-rfc1918-10",
        "X-Forwarded-For: 10.0.0.1",
        Header,
        [Mutation::SetHeader("X-Forwarded-For", "10.0.0.1")]
    ),
    technique!(
        "xff-rfc1918-192",
        "X-Forwarded-For: 192.168.1.1",
        Header,
        [Mutation::SetHeader("X-Forwarded-For", "192.168.1.1")]
    ),
    technique!(
        "xff-metadata",
        "X-Forwarded-For: 169.254.169.254",
        Header,
        [Mutation::SetHeader("X-Forwarded-For", "169.254.169.254")]
    ),
    // Client-IP header family
    technique!(
        "real-ip",
        "X-Real-IP: 127.0.0.1",
        Header,
        [Mutation::SetHeader("X-Real-IP", "127.0.0.1")]
    ),
    technique!(
        "true-client-ip",
        "True-Client-IP: 127.0.0.1",
        Header,
        [Mutation::SetHeader("True-Client-IP", "127.0.0.1")]
    ),
    technique!(
        "cf-connecting-ip",
        "CF-Connecting-IP: 127.0.0.1",
        Header,
        [Mutation::SetHeader("CF-Connecting-IP", "127.0.0.1")]
    ),
    technique!(
        "originating-ip",
        "X-Originating-IP: 127.0.0.1",
        Header,
        [Mutation::SetHeader("X-Originating-IP", "127.0.0.1")]
    ),
    technique!(
        "custom-ip-auth",
        "X-Custom-IP-Authorization: 127.0.0.1",
        Header,
        [Mutation::SetHeader("X-Custom-IP-Authorization", "127.0.0.1")]
    ),
    // Forwarded-host rewrites
    technique!(
        "xfh-localhost",
        "X-Forwarded-Host: localhost",
        Header,
        [Mutation::SetHeader("X-Forwarded-Host", "localhost")]
    ),
    technique!(
        "xfh-loopback",
        "X-Forwarded-Host: 127.0.0.1",
        Header,
        [Mutation::SetHeader("X-Forwarded-Host", "127.0.0.1")]
    ),
    technique!(
        "xfh-self",
        "X-Forwarded-Host: origin host",
        Header,
        [Mutation::SetHeader("X-Forwarded-Host", "{host}")]
    ),
    // URL override headers against a privileged path
    technique!(
        "original-url-root",
        "X-Original-URL: /",
        BusinessLogic,
        [Mutation::SetHeader("X-Original-URL", "/")]
    ),
    technique!(
        "original-url-admin",
        "X-Original-URL: /admin",
        BusinessLogic,
        [Mutation::SetHeader("X-Original-URL", "/admin")]
    ),
    technique!(
        "rewrite-url-admin",
        "X-Rewrite-URL: /admin",
        BusinessLogic,
        [Mutation::SetHeader("X-Rewrite-URL", "/admin")]
    ),
    // Cache layer coaxing
    technique!(
        "cache-no-cache",
        "Cache-Control: no-cache",
        Header,
        [Mutation::SetHeader("Cache-Control", "no-cache")]
    ),
    technique!(
        "cache-no-store",
        "Cache-Control: no-store",
        Header,
        [Mutation::SetHeader("Cache-Control", "no-store")]
    ),
    technique!(
        "cache-max-age-0",
        "Cache-Control: max-age=0",
        Header,
        [Mutation::SetHeader("Cache-Control", "max-age=0")]
    ),
    technique!(
        "pragma-no-cache",
        "Pragma: no-cache",
        Header,
        [Mutation::SetHeader("Pragma", "no-cache")]
    ),
    // Path encoding
    technique!(
        "path-dot-segment",
        "Path encoding: /%2e/",
        Encoding,
        [Mutation::SetPath("/%2e/")]
    ),
    technique!(
        "path-encoded-slash",
        "Path encoding: /..%2f",
        Encoding,
        [Mutation::SetPath("/..%2f")]
    ),
    technique!(
        "path-double-encoded",
        "Path double encoding: /%252e%252e/",
        Encoding,
        [Mutation::SetPath("/%252e%252e/")]
    ),
    technique!(
        "path-semicolon",
        "Path encoding: /..;/",
        Encoding,
        [Mutation::SetPath("/..;/")]
    ),
    // Method tampering
    technique!(
        "method-post",
        "Method tampering: POST",
        Protocol,
        [Mutation::SetMethod(HttpMethod::Post)]
    ),
    technique!(
        "method-put",
        "Method tampering: PUT",
        Protocol,
        [Mutation::SetMethod(HttpMethod::Put)]
    ),
    technique!(
        "method-delete",
        "Method tampering: DELETE",
        Protocol,
        [Mutation::SetMethod(HttpMethod::Delete)]
    ),
    technique!(
        "method-options",
        "Method tampering: OPTIONS",
        Protocol,
        [Mutation::SetMethod(HttpMethod::Options)]
    ),
    // TRACE echoes the request message, header and all, into the body.
    technique!(
        "method-trace",
        "Method tampering: TRACE",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Trace),
            Mutation::SetHeader("X-Trace-Probe", "{token}"),
        ],
        Signal::ReflectedToken
    ),
    technique!(
        "method-override",
        "X-HTTP-Method-Override: GET on POST",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetHeader("X-HTTP-Method-Override", "GET"),
        ]
    ),
    // Content-Type manipulation on POST
    technique!(
        "content-type-json",
        "Content-Type: application/json",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetBody("application/json", "{}"),
        ]
    ),
    technique!(
        "content-type-xml",
        "Content-Type: application/xml",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetBody("application/xml", "<probe/>"),
        ]
    ),
    technique!(
        "content-type-plain",
        "Content-Type: text/plain",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetBody("text/plain", "probe"),
        ]
    ),
    technique!(
        "content-type-multipart",
        "Content-Type: multipart/form-data",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetBody("multipart/form-data", "probe"),
        ]
    ),
    // Framing headers the edge may parse differently than the origin
    technique!(
        "transfer-encoding-identity",
        "Transfer-Encoding: identity",
        Protocol,
        [
            Mutation::SetMethod(HttpMethod::Post),
            Mutation::SetHeader("Transfer-Encoding", "identity"),
            Mutation::SetBody("text/plain", "probe"),
        ]
    ),
    technique!(
        "range-byte-zero",
        "Range: bytes=0-0",
        Protocol,
        [Mutation::SetHeader("Range", "bytes=0-0")]
    ),
    // Reflection probes
    technique!(
        "reflect-query",
        "Reflected query marker",
        Injection,
        [Mutation::InjectQueryMarker],
        Signal::ReflectedToken
    ),
    technique!(
        "reflect-header",
        "Reflected request header",
        Injection,
        [
            Mutation::SetHeader("X-Probe-Echo", "{token}"),
            Mutation::InjectQueryMarker,
        ],
        Signal::ReflectedToken
    ),
    // Reconnaissance
    technique!(
        "origin-reflection",
        "Origin reflection probe",
        Reconnaissance,
        [Mutation::SetHeader("Origin", "https://probe.invalid")],
        Signal::EchoedHeader("Access-Control-Allow-Origin")
    ),
    technique!(
        "recon-admin-path",
        "Privileged path probe: /admin",
        Reconnaissance,
        [Mutation::SetPath("/admin")]
    ),
    technique!(
        "recon-slow-loris-lite",
        "Latency probe: oversized Accept header",
        Reconnaissance,
        [Mutation::SetHeader(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"
        )],
        Signal::TimingAnomaly
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_row_has_a_mutation() {
        for technique in BUILTIN {
            assert!(
                !technique.mutations.is_empty(),
                "{} has no mutations",
                technique.id
            );
        }
    }

    #[test]
    fn test_all_categories_covered() {
        for category in [
            Category::Header,
            Category::Encoding,
            Category::Protocol,
            Category::Injection,
            Category::BusinessLogic,
            Category::Reconnaissance,
        ] {
            assert!(
                BUILTIN.iter().any(|t| t.category == category),
                "no technique in category {category}"
            );
        }
    }
}
