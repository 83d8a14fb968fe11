/// `PMTK001` flag for a command that was accepted and applied
pub const ACK_SUCCEEDED: u8 = 3;

/// `PMTK314`: NMEA output selection
pub const SET_NMEA_OUTPUT: u16 = 314;

/// `PMTK220`: position fix interval
pub const SET_FIX_INTERVAL: u16 = 220;

/// XOR of every byte between `$` and `*`.
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

/// Wraps a sentence body as `$<body>*<CS>\r\n`.
pub fn frame_command(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, checksum(body))
}

/// Only GGA sentences, once per fix.
pub fn gga_only_output() -> String {
    format!("PMTK{},0,0,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0", SET_NMEA_OUTPUT)
}

pub fn fix_interval(interval_ms: u32) -> String {
    format!("PMTK{},{}", SET_FIX_INTERVAL, interval_ms)
}

/// Acknowledgement of a PMTK command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub command: u16,
    pub flag: u8,
}

impl Ack {
    pub fn succeeded(&self) -> bool {
        self.flag == ACK_SUCCEEDED
    }
}

/// Parses `$PMTK001,<cmd>,<flag>*CS`. Lines with a bad checksum are not acks.
pub fn parse_ack(line: &str) -> Option<Ack> {
    let sentence = line.trim().strip_prefix('$')?;
    let (body, cs) = sentence.split_once('*')?;
    let expected = u8::from_str_radix(cs.trim(), 16).ok()?;
    if checksum(body) != expected {
        return None;
    }

    let mut fields = body.split(',');
    if fields.next()? != "PMTK001" {
        return None;
    }
    let command = fields.next()?.parse().ok()?;
    let flag = fields.next()?.parse().ok()?;

    Some(Ack { command, flag })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_gga_only() {
        assert_eq!(
            frame_command(&gga_only_output()),
            "$PMTK314,0,0,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0*29\r\n"
        );
        assert_eq!(frame_command(&fix_interval(1000)), "$PMTK220,1000*1F\r\n");
    }

    #[test]
    fn test_parse_success_ack() {
        let ack = parse_ack("$PMTK001,314,3*36\r\n").unwrap();
        assert_eq!(ack.command, SET_NMEA_OUTPUT);
        assert!(ack.succeeded());

        let ack = parse_ack("$PMTK001,220,2*31").unwrap();
        assert_eq!(ack.command, SET_FIX_INTERVAL);
        assert!(!ack.succeeded());
    }

    #[test]
    fn test_bad_checksum_is_not_an_ack() {
        assert_eq!(parse_ack("$PMTK001,314,3*37"), None);
        assert_eq!(parse_ack("$PMTK001,314,3"), None);
    }

    #[test]
    fn test_other_sentences_ignored() {
        let gga = "GPGGA,092751.000,,,,,0,0,,,M,,M,,";
        assert_eq!(parse_ack(&frame_command(gga)), None);
        assert_eq!(parse_ack(""), None);
    }
}
