/// Tag the video media section of an SDP with an outbound bandwidth ceiling
/// (`b=TIAS`, bits per second). Any bandwidth line already present in the
/// video section is replaced; other sections are left alone.
pub fn apply_bitrate_hint(sdp: &str, max_kbps: u32) -> String {
    let bandwidth_line = format!("b=TIAS:{}", u64::from(max_kbps) * 1000);

    let mut out: Vec<String> = Vec::new();
    let mut in_video = false;
    // b= belongs after the section's c= line when there is one, otherwise
    // directly after the m= line.
    let mut pending = false;

    for raw in sdp.split('\n') {
        let line = raw.trim_end_matches('\r');

        if line.starts_with("m=") {
            if pending {
                out.push(bandwidth_line.clone());
            }
            in_video = line.starts_with("m=video");
            pending = in_video;
            out.push(line.to_string());
            continue;
        }

        if in_video && line.starts_with("b=") {
            // Superseded by our hint.
            continue;
        }

        if pending && !line.starts_with("c=") && !line.starts_with("i=") && !line.is_empty() {
            out.push(bandwidth_line.clone());
            pending = false;
        }

        out.push(line.to_string());

        if pending && line.starts_with("c=") {
            out.push(bandwidth_line.clone());
            pending = false;
        }
    }

    if pending {
        out.push(bandwidth_line.clone());
    }

    // SDP is CRLF-delimited and ends with a line break.
    let mut joined = out
        .iter()
        .filter(|l| !l.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\r\n");
    joined.push_str("\r\n");
    joined
}
