#![no_main]
use libfuzzer_sys::fuzz_target;

use dns_types::protocol::types::{
    DomainName, Message, QueryClass, QueryType, Question, RecordType,
};

// Every question shares a suffix with the first, so the encoded
// message is full of compression pointers.
fuzz_target!(|names: (DomainName, Vec<DomainName>)| {
    let (suffix, prefixes) = names;
    let mut message = Message::from_question(
        0,
        Question {
            name: suffix.clone(),
            qtype: QueryType::Record(RecordType::A),
            qclass: QueryClass::Wildcard,
        },
    );
    for prefix in prefixes {
        if let Ok(name) = prefix.concat(&suffix) {
            message.questions.push(Question {
                name,
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Wildcard,
            });
        }
    }

    if let Ok(serialised) = message.to_octets() {
        assert_eq!(Ok(message), Message::from_octets(&serialised));
    }
});
